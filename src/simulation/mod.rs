pub mod engine;
mod run_loop;
