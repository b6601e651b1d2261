//! Integration tests for ct

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Stand-in for conan: logs every call, answers inspect and the json generator
    const FAKE_CONAN: &str = r#"#!/bin/sh
echo "$(pwd)|$*" >> "$FAKE_CONAN_LOG"
case "$1" in
  inspect)
    printf '{"name": "hello", "version": "0.1.0", "license": "MIT"}' > "$4"
    ;;
  search)
    exit "${FAKE_SEARCH_EXIT:-0}"
    ;;
  install)
    printf '{"deps_env_info": {"HELLO_HOME": "/pkg/hello", "PATH": ["/pkg/hello/bin"]}}' > conanbuildinfo.json
    ;;
  fail)
    exit 3
    ;;
esac
exit "${FAKE_CONAN_EXIT:-0}"
"#;

    struct Sandbox {
        dir: TempDir,
    }

    impl Sandbox {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let conan = dir.path().join("fake-conan");
            std::fs::write(&conan, FAKE_CONAN).unwrap();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&conan, std::fs::Permissions::from_mode(0o755)).unwrap();
            }
            std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
            std::fs::write(dir.path().join("pkg").join("conanfile.py"), "").unwrap();
            Self { dir }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn recipe(&self) -> PathBuf {
            self.path().join("pkg").join("conanfile.py")
        }

        fn ct(&self) -> Command {
            let mut cmd = ct();
            cmd.current_dir(self.path())
                .env("CT_CONAN_CMD", self.path().join("fake-conan"))
                .env("FAKE_CONAN_LOG", self.path().join("calls.log"))
                .env_remove("CT_CREATE_LOCAL")
                .args(["--no-local", "--config"])
                .arg(self.path().join("config.toml"));
            cmd
        }

        /// Logged calls as `cwd|args`, metadata inspection excluded
        fn calls(&self) -> Vec<String> {
            std::fs::read_to_string(self.path().join("calls.log"))
                .unwrap_or_default()
                .lines()
                .filter(|line| !line.contains("|inspect "))
                .map(str::to_string)
                .collect()
        }
    }

    fn ct() -> Command {
        cargo_bin_cmd!("ct")
    }

    #[test]
    fn help_displays() {
        ct().arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("conan"));
    }

    #[test]
    fn version_displays() {
        ct().arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ct"));
    }

    #[test]
    fn config_path() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("fake-conan"));
    }

    #[test]
    fn local_config_is_merged() {
        let sandbox = Sandbox::new();
        std::fs::write(
            sandbox.path().join(".ct.toml"),
            "[build]\nprofiles = [\"from-local.p\"]\n",
        )
        .unwrap();

        let mut cmd = ct();
        cmd.current_dir(sandbox.path())
            .arg("--config")
            .arg(sandbox.path().join("config.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("from-local.p"));
    }

    #[test]
    fn inspect_prints_selected_fields() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .arg("inspect")
            .arg(sandbox.recipe())
            .args(["name", "version"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\": \"hello\""))
            .stdout(predicate::str::contains("\"version\": \"0.1.0\""))
            .stdout(predicate::str::contains("license").not());
    }

    #[test]
    fn inspect_output_file_holds_bare_json() {
        let sandbox = Sandbox::new();
        let output = sandbox.path().join("meta.json");
        sandbox
            .ct()
            .arg("inspect")
            .arg(sandbox.recipe())
            .arg("--output")
            .arg(&output)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"license\"").not());

        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(metadata["name"], "hello");
        assert_eq!(metadata["license"], "MIT");
    }

    #[test]
    fn inspect_missing_field_fails() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .arg("inspect")
            .arg(sandbox.recipe())
            .arg("topics")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Field not found in recipe metadata: topics"));
    }

    #[test]
    fn create_prints_reference_and_trace() {
        let sandbox = Sandbox::new();
        let recipe = sandbox.recipe();
        sandbox
            .ct()
            .arg("create")
            .arg(&recipe)
            .args(["-u", "user", "-c", "testing", "-p", "a.p", "-r", "origin"])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!(
                "$ {} create {} hello/0.1.0@user/testing --profile a.p --build outdated --remote origin",
                sandbox.path().join("fake-conan").display(),
                recipe.display()
            )))
            .stdout(predicate::str::ends_with("hello/0.1.0@user/testing\n"));
    }

    #[test]
    fn create_local_runs_lifecycle_in_build_folder() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .arg("create")
            .arg(sandbox.recipe())
            .args(["-u", "user", "-c", "testing", "--version", "2.0", "--local", "--script"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello/2.0@user/testing"));

        let build = sandbox.path().join("pkg").join("_build");
        let calls = sandbox.calls();
        let steps: Vec<&str> = calls
            .iter()
            .map(|c| c.split('|').nth(1).unwrap().split(' ').next().unwrap())
            .collect();
        assert_eq!(steps, ["install", "build", "package", "export-pkg"]);
        assert!(calls.iter().all(|c| c.starts_with(&format!("{}|", build.display()))));
        assert!(sandbox.path().join("pkg").join("ct_export-pkg.sh").exists());
    }

    #[test]
    fn failing_command_reports_exit_code() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .env("FAKE_CONAN_EXIT", "2")
            .arg("export")
            .arg(sandbox.recipe())
            .args(["-u", "user", "-c", "testing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("(returncode=2)"));
    }

    #[test]
    fn exists_maps_search_result_to_exit_code() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .args(["exists", "hello/0.1.0@user/testing"])
            .assert()
            .success();
        sandbox
            .ct()
            .env("FAKE_SEARCH_EXIT", "1")
            .args(["exists", "hello/0.1.0@user/testing", "-r", "origin"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn malformed_reference_is_rejected() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .args(["download", "hello/0.1.0"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid reference"));
    }

    #[test]
    fn alias_prints_alias_reference() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .args(["alias", "hello/0.1.0@user/testing", "--version", "latest"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "alias hello/latest@user/testing hello/0.1.0@user/testing",
            ))
            .stdout(predicate::str::ends_with("hello/latest@user/testing\n"));
    }

    #[test]
    fn workspace_writes_descriptors() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .arg("workspace")
            .arg(sandbox.recipe())
            .args(["-u", "user", "-c", "testing", "--build-folder", "ws"])
            .assert()
            .success();

        let ws = sandbox.path().join("ws");
        let layout = std::fs::read_to_string(ws.join("layout.txt")).unwrap();
        assert!(layout.contains("[hello/0.1.0@user/testing:build_folder]"));
        let descriptor = std::fs::read_to_string(ws.join("ws.yml")).unwrap();
        assert!(descriptor.contains("editables:"));
        assert!(descriptor.contains("layout: layout.txt"));
        assert!(sandbox.calls()[0].contains("|workspace install"));
    }

    #[test]
    fn exec_runs_with_package_environment() {
        let sandbox = Sandbox::new();
        sandbox
            .ct()
            .args(["exec", "-r", "hello/0.1.0@user/testing", "--", "sh", "-c"])
            .arg("test \"$HELLO_HOME\" = /pkg/hello && case \"$PATH\" in /pkg/hello/bin:*) exit 5;; esac")
            .assert()
            .code(5);
    }
}
