//! JSON and event-stream endpoints used by the browser script and `sb-cli`.

pub mod bookmarks;
