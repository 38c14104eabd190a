//! Workflow scenarios driven by scripted services.

mod support;
