pub mod burrow {
    tonic::include_proto!("burrow");
}

pub use burrow::*;
