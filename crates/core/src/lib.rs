pub mod error;
pub mod types;

pub use types::{
    JobState, LadderError, ResolutionSpec, StreamMode, StreamStatus, default_ladder,
    parse_ladder, validate_ladder,
};
