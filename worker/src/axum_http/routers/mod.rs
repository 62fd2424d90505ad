pub mod commitment_sweep;
