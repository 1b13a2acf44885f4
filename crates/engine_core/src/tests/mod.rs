//! Cross-module scenarios: collision between placed meshes and the
//! animation pipeline from clip to published frame.
