//! Sample schema scripts for the voting app
//!
//! Used by the demo program and the tests; real stacks pass their own scripts.

/// MySQL: votes table with two zeroed choices
pub const VOTES_MYSQL_CREATE: &str = r#"CREATE TABLE votesTable (
    choice_id int(10) NOT NULL AUTO_INCREMENT,
    vote_count int(10) NOT NULL,
    PRIMARY KEY (choice_id)
) ENGINE=InnoDB;
INSERT INTO votesTable(choice_id, vote_count) VALUES (0,0);
INSERT INTO votesTable(choice_id, vote_count) VALUES (1,0);
"#;

/// MySQL: drop the votes table
pub const VOTES_MYSQL_DELETE: &str = "DROP TABLE votesTable CASCADE";

/// PostgreSQL: drop the voting_app schema
pub const VOTES_POSTGRES_DELETE: &str = "DROP SCHEMA IF EXISTS voting_app CASCADE";

/// PostgreSQL: voting_app schema with a choice table, readable by `app_user`
pub fn votes_postgres_create(app_user: &str) -> String {
    format!(
        r#"CREATE SCHEMA voting_app;
CREATE TABLE voting_app.choice(
    choice_id SERIAL PRIMARY KEY,
    text VARCHAR(255) NOT NULL,
    vote_count INTEGER NOT NULL
);
GRANT USAGE ON SCHEMA voting_app TO {app_user};
GRANT SELECT, UPDATE ON ALL TABLES IN SCHEMA voting_app TO {app_user};
INSERT INTO voting_app.choice (text, vote_count) VALUES ('tabs', 0);
INSERT INTO voting_app.choice (text, vote_count) VALUES ('spaces', 0);
"#
    )
}

/// Get a sample script by name
pub fn get_sample_script(name: &str) -> Option<&'static str> {
    match name {
        "votes-mysql-create" => Some(VOTES_MYSQL_CREATE),
        "votes-mysql-delete" => Some(VOTES_MYSQL_DELETE),
        "votes-postgres-delete" => Some(VOTES_POSTGRES_DELETE),
        _ => None,
    }
}
