use assert_cmd::Command;
use std::path::Path;

const VARS: [(&str, &str); 6] = [
    ("STICKYNOTE_API_KEY", "test-key"),
    ("STICKYNOTE_AUTH_DOMAIN", "board.test"),
    ("STICKYNOTE_PROJECT_ID", "board-cli"),
    ("STICKYNOTE_STORAGE_BUCKET", "board-cli.bucket"),
    ("STICKYNOTE_MESSAGING_SENDER_ID", "42"),
    ("STICKYNOTE_APP_ID", "1:42:web:cli"),
];

/// Binary with every store variable removed from the environment.
pub fn bare_cmd() -> Command {
    let mut cmd = Command::cargo_bin("stickynote").unwrap();
    for (key, _) in VARS {
        cmd.env_remove(key);
    }
    cmd.env_remove("STICKYNOTE_DATA_DIR");
    cmd
}

/// Binary configured against a database under `data_dir`.
pub fn board_cmd(data_dir: &Path) -> Command {
    let mut cmd = bare_cmd();
    for (key, value) in VARS {
        cmd.env(key, value);
    }
    cmd.env("STICKYNOTE_DATA_DIR", data_dir);
    cmd.arg("--log-level").arg("warn");
    cmd
}
