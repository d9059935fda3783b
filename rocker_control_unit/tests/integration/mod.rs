mod rig;

mod closed_loop;
mod commands;
mod config_loading;
mod framing;
mod regulation;
