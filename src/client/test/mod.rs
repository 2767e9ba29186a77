
mod auth;
mod hooks;
mod redirects;
