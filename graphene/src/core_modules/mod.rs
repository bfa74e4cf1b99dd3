pub mod frame_io;
pub mod graph_file;
pub mod motion;
pub mod overlay;
pub mod scene_state;
pub mod triple;
