//! Publication of analyses back to the originating pull request.

pub mod client;
pub mod github;
pub mod host;
pub mod render;

pub use client::PublicationClient;
pub use github::GitHubCommentHost;
pub use host::{CommentHost, HostError, PostedComment};
pub use render::{delivery_marker, render_comment};
