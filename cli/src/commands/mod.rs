pub mod proposal;
