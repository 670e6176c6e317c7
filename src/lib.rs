pub mod graphics;
pub mod multipass;
