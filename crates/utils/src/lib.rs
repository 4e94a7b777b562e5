pub mod assets;
pub mod shell;
