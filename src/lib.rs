/// rprompter - Teleprompter com faixa de leitura
/// Rolagem ao vivo via wgpu e vídeo pré-renderizado para picture-in-picture

pub mod camera;
pub mod config;
pub mod pip;
pub mod prompter;
pub mod renderer;
pub mod script;
pub mod session;
pub mod settings;
pub mod video;
