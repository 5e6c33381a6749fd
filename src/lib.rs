//! Root crate: footswitch engine plus the task-wiring `main` binary uses.
//! Everything wire-protocol/state-machine related lives in `tonex-core`/
//! `tonex-protocol`; this crate only owns the footswitch decision logic and
//! the orchestration that stitches HAL tasks together (§4.F, §5).

pub mod footswitch;
