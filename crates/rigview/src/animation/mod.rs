pub mod blend;
pub mod player;
