//! # Tables
//!
//! Column order here is the order clients decode rows in.

use spacetimedb::Identity;

/// Registered player account
#[spacetimedb::table(name = user, public)]
#[derive(Clone, Debug)]
pub struct User {
    #[primary_key]
    pub identity: Identity,
    pub username: String,
    pub created_at: i64,
    pub last_login: i64,
}

/// A playable character owned by a user
#[spacetimedb::table(name = character, public)]
#[derive(Clone, Debug)]
pub struct Character {
    #[primary_key]
    #[auto_inc]
    pub id: u64,
    #[index(btree)]
    pub user_identity: Identity,
    #[unique]
    pub name: String,
    pub class: String,
    pub level: u32,
    pub position_x: f32,
    pub position_y: f32,
    pub direction: String,
    pub created_at: i64,
    pub last_updated: i64,
}

/// Cosmetic data, one row per character
#[spacetimedb::table(name = character_appearance, public)]
#[derive(Clone, Debug)]
pub struct CharacterAppearance {
    #[primary_key]
    pub character_id: u64,
    pub skin: String,
    pub hair: String,
    pub eyes: String,
    pub outfit: String,
}

/// Active play session, at most one per identity
#[spacetimedb::table(name = session, public)]
#[derive(Clone, Debug)]
pub struct Session {
    #[primary_key]
    pub identity: Identity,
    pub character_id: u64,
    pub address: String,
    pub connected_at: i64,
    pub last_activity: i64,
}
