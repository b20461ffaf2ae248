//! Tests for probe encoding and classification.

mod prop;
