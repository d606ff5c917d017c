pub mod gates;
pub mod reconstruct;
pub mod schedule;
pub mod selection;
