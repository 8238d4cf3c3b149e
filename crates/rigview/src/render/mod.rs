pub mod backend;
pub mod camera;
pub mod render_loop;
pub mod shader;
pub mod texture;
