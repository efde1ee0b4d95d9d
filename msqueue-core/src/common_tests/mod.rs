pub mod stress_harness;
