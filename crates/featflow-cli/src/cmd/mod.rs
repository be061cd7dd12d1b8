pub mod feature;
pub mod init;
