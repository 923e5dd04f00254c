//! Git repository helpers for tests.
//!
//! Everything goes through libgit2 so tests do not depend on a `git`
//! binary or on the user's global identity.

use git2::{Commit, IndexAddOption, Oid, Repository, Signature};
use std::path::Path;

/// Identity configured on every test repository.
pub const TEST_USER: &str = "Test User";
pub const TEST_EMAIL: &str = "test@example.com";

/// Initialize a repository at `path` with a local identity.
pub fn init_repo(path: &Path) -> Repository {
    let repo = Repository::init(path)
        .unwrap_or_else(|e| panic!("Failed to init repository at {}: {}", path.display(), e));

    {
        let mut config = repo.config().expect("Failed to open repository config");
        config
            .set_str("user.name", TEST_USER)
            .expect("Failed to set user.name");
        config
            .set_str("user.email", TEST_EMAIL)
            .expect("Failed to set user.email");
    }

    repo
}

/// Stage every change (additions, modifications, deletions) and commit it.
pub fn commit_all(repo: &Repository, message: &str) -> Oid {
    let mut index = repo.index().expect("Failed to open index");
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .expect("Failed to stage files");
    index
        .update_all(["*"].iter(), None)
        .expect("Failed to stage deletions");
    index.write().expect("Failed to write index");

    let tree_id = index.write_tree().expect("Failed to write tree");
    let tree = repo.find_tree(tree_id).expect("Failed to find tree");
    let signature = Signature::now(TEST_USER, TEST_EMAIL).expect("Failed to build signature");

    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("Failed to commit")
}

/// Number of entries on the stash stack.
pub fn stash_count(repo: &mut Repository) -> usize {
    let mut count = 0;
    repo.stash_foreach(|_, _, _| {
        count += 1;
        true
    })
    .expect("Failed to enumerate stash");
    count
}
