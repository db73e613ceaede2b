mod fake_adapter;

pub use fake_adapter::{FakeAdapter, FakeOutcome, FakeStats, fake_registry, rows_result};
