//! Tests for the pipeline variants, split by concern.

mod tracked;
