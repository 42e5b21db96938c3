pub mod auth_service;
pub mod comment_service;
pub mod comment_tree;
pub mod community_service;
pub mod feed_ranker;
pub mod post_service;
pub mod vote_service;
