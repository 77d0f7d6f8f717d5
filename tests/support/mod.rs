//! Shared fixtures for the integration tests.
//!
//! Repositories are real git repositories in temp directories, built with
//! the `git` CLI so the library is exercised against what git itself writes.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use uplift_unroll::core::layers::CMAKE_PIN_FILE;
use uplift_unroll::core::types::Oid;
use uplift_unroll::git::Git;

/// A real git repository on `main` with an initial commit.
pub struct TestRepo {
    path: PathBuf,
}

impl TestRepo {
    /// Initialize a repository at `path`, creating the directory.
    pub fn init(path: &Path) -> Self {
        fs::create_dir_all(path).expect("failed to create repo dir");
        run_git(path, &["init", "-q"]);
        run_git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(path, &["config", "user.email", "test@example.com"]);
        run_git(path, &["config", "user.name", "Test User"]);
        run_git(path, &["config", "commit.gpgsign", "false"]);

        let repo = Self {
            path: path.to_path_buf(),
        };
        repo.commit_files(&[("README.md", "# Test Repo\n")], "Initial commit");
        repo
    }

    /// Get the path to the repository.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a Git interface to this repository.
    pub fn git(&self) -> Git {
        Git::open(&self.path).expect("failed to open test repo")
    }

    /// Write files, commit them, and return the new commit OID.
    pub fn commit_files(&self, files: &[(&str, &str)], message: &str) -> Oid {
        for (path, contents) in files {
            let full = self.path.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(&full, contents).unwrap();
            run_git(&self.path, &["add", path]);
        }
        run_git(&self.path, &["commit", "-q", "--allow-empty", "-m", message]);
        self.head()
    }

    /// Commit a pin file pointing `variable` at `target`, plus any extra files.
    pub fn commit_pin(&self, variable: &str, target: &Oid, extra: &[(&str, &str)], message: &str) -> Oid {
        let pin = cmake_pin(variable, target);
        let mut files = vec![(CMAKE_PIN_FILE, pin.as_str())];
        files.extend_from_slice(extra);
        self.commit_files(&files, message)
    }

    /// Current HEAD commit.
    pub fn head(&self) -> Oid {
        Oid::new(self.git_output(&["rev-parse", "HEAD"])).unwrap()
    }

    /// Run git and return trimmed stdout.
    pub fn git_output(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    /// Run git, panicking on failure.
    pub fn run(&self, args: &[&str]) {
        run_git(&self.path, args);
    }

    /// Commit a gitlink at `path` pointing at `target`.
    pub fn commit_gitlink(&self, path: &str, target: &Oid, message: &str) -> Oid {
        let entry = format!("160000,{target},{path}");
        self.run(&["update-index", "--add", "--cacheinfo", &entry]);
        self.run(&["commit", "-q", "-m", message]);
        self.head()
    }
}

/// Run a git command in the given directory.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Contents of a pin file naming `target`.
pub fn cmake_pin(variable: &str, target: &Oid) -> String {
    format!("# Pinned dependencies\nset({variable} \"{target}\")\n")
}

/// Three layer checkouts side by side, the way the workspace config expects.
///
/// - `tt-metal`: M1..M3
/// - `tt-mlir`: C1 pins M1, C4 moves the pin to M3, C2/C3/C5 are plain
/// - `tt-xla`: F1 pins C1, F2 uplifts to C5, F3 is plain
pub struct Workspace {
    pub dir: TempDir,
    pub frontend: TestRepo,
    pub core: TestRepo,
    pub base: TestRepo,
    pub base_commits: Vec<Oid>,
    pub core_commits: Vec<Oid>,
    pub frontend_commits: Vec<Oid>,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        let base = TestRepo::init(&dir.path().join("tt-metal"));
        let base_commits: Vec<Oid> = (1..=3)
            .map(|i| {
                let contents = format!("metal {i}\n");
                base.commit_files(&[("metal.txt", contents.as_str())], &format!("M{i}: metal change"))
            })
            .collect();

        let core = TestRepo::init(&dir.path().join("tt-mlir"));
        let mut core_commits = Vec::new();
        core_commits.push(core.commit_pin(
            "TT_METAL_VERSION",
            &base_commits[0],
            &[("lib.cpp", "v1\n")],
            "C1: pin tt-metal",
        ));
        core_commits.push(core.commit_files(&[("lib.cpp", "v2\n")], "C2: fix lowering"));
        core_commits.push(core.commit_files(&[("lib.cpp", "v3\n")], "C3: add op"));
        core_commits.push(core.commit_pin(
            "TT_METAL_VERSION",
            &base_commits[2],
            &[],
            "C4: update tt-metal",
        ));
        core_commits.push(core.commit_files(&[("lib.cpp", "v5\n")], "C5: cleanup"));

        let frontend = TestRepo::init(&dir.path().join("tt-xla"));
        let mut frontend_commits = Vec::new();
        frontend_commits.push(frontend.commit_pin(
            "TT_MLIR_VERSION",
            &core_commits[0],
            &[],
            "F1: pin tt-mlir",
        ));
        frontend_commits.push(frontend.commit_pin(
            "TT_MLIR_VERSION",
            &core_commits[4],
            &[],
            "Uplift third_party/tt-mlir to C5",
        ));
        frontend_commits.push(frontend.commit_files(&[("docs.md", "docs\n")], "F3: docs"));

        Self {
            dir,
            frontend,
            core,
            base,
            base_commits,
            core_commits,
            frontend_commits,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// An empty config file, so tests never pick up a user's global config.
    pub fn empty_config(&self) -> PathBuf {
        let path = self.dir.path().join("empty-config.toml");
        fs::write(&path, "").unwrap();
        path
    }
}
