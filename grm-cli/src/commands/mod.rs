pub mod convert_grm;
pub mod make_grm;
