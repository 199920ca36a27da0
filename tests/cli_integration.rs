//! CLI integration tests
//!
//! Tests the command-line interface end-to-end.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const KEY: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Get path to the xv binary
fn xv_bin() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps/
    path.push("xv");
    path
}

fn xv_command(args: &[&str], key_file: &Path) -> Command {
    let mut command = Command::new(xv_bin());
    command
        .args(args)
        .env("XV_KEY_FILE", key_file)
        .env_remove("XV_KEY")
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

/// Run xv with `stdin` piped in and the key file pointed at `key_file`.
fn run_xv(args: &[&str], stdin: &[u8], key_file: &Path) -> Output {
    let mut child = xv_command(args, key_file)
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let mut pipe = child.stdin.take().expect("failed to open stdin");
        // Ignore BrokenPipe errors - the command may exit before reading stdin
        // if it encounters an error (e.g., missing key file)
        let _ = pipe.write_all(stdin);
    }

    child.wait_with_output().unwrap()
}

/// Run xv with stdin connected to /dev/null, as when nothing is piped in.
fn run_xv_unpiped(args: &[&str], key_file: &Path) -> Output {
    xv_command(args, key_file)
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_encrypt_decrypt_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    for encoder in ["base64", "hex", "raw"] {
        let encrypted = run_xv(&["enc", "-e", encoder, "-k", KEY], b"Hello, xv!\n", &key_file);
        assert_success(&encrypted, "encrypt");
        let checksum = stderr(&encrypted);
        assert!(checksum.contains("MD5/"), "missing checksum: {}", checksum);

        let decrypted = run_xv(&["dec", "-d", encoder, "-k", KEY], &encrypted.stdout, &key_file);
        assert_success(&decrypted, "decrypt");
        assert_eq!(decrypted.stdout, b"Hello, xv!\n");
        assert_eq!(stderr(&decrypted).trim(), checksum.trim());
    }
}

#[test]
fn test_decrypt_known_ciphertext() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let result = run_xv(
        &["d", "-d", "hex", "-k", KEY],
        b"242424242424242424242424f21b7ef3296c73da028eb15235f5e5032442e4d47ccb127f9a5cfc\n",
        &key_file,
    );
    assert_success(&result, "decrypt");
    assert_eq!(result.stdout, b"hello world");
}

#[test]
fn test_default_command_with_key_file() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let result = run_xv(&["init", KEY], b"", &key_file);
    assert_success(&result, "init");
    assert_eq!(fs::read_to_string(&key_file).unwrap(), KEY);

    // No subcommand means encrypt.
    let plaintext = fs::read(testdata_path("hello.txt")).unwrap();
    let encrypted = run_xv(&[], &plaintext, &key_file);
    assert_success(&encrypted, "encrypt");

    let decrypted = run_xv(&["dec"], &encrypted.stdout, &key_file);
    assert_success(&decrypted, "decrypt");
    assert_eq!(decrypted.stdout, plaintext);
}

#[test]
fn test_explicit_key_overrides_key_file() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");
    fs::write(&key_file, "b".repeat(32)).unwrap();

    let encrypted = run_xv(&["enc", "-k", KEY], b"secret", &key_file);
    assert_success(&encrypted, "encrypt");

    let decrypted = run_xv(&["dec"], &encrypted.stdout, &key_file);
    assert!(!decrypted.status.success());
    assert!(decrypted.stdout.is_empty());

    let decrypted = run_xv(&["dec", "-k", KEY], &encrypted.stdout, &key_file);
    assert_success(&decrypted, "decrypt");
    assert_eq!(decrypted.stdout, b"secret");
}

#[test]
fn test_wrong_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let encrypted = run_xv(&["enc", "-e", "hex", "-k", KEY], b"secret", &key_file);
    assert_success(&encrypted, "encrypt");

    let other_key = "c".repeat(32);
    let result = run_xv(&["dec", "-d", "hex", "-k", &other_key], &encrypted.stdout, &key_file);
    assert_eq!(result.status.code(), Some(1));
    let stderr = stderr(&result);
    assert!(
        stderr.contains("Error:") && stderr.contains("corrupt input, tampered-with data, or wrong key"),
        "unexpected error output: {}",
        stderr
    );
}

#[test]
fn test_wrong_decoder_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let encrypted = run_xv(&["enc", "-e", "base64", "-k", KEY], b"secret", &key_file);
    assert_success(&encrypted, "encrypt");

    let result = run_xv(&["dec", "-d", "hex", "-k", KEY], &encrypted.stdout, &key_file);
    assert!(!result.status.success());
    assert!(stderr(&result).contains("failed to decode data from hex"));
}

#[test]
fn test_missing_key_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join("nonexistent");

    let result = run_xv(&["enc"], b"data", &key_file);
    assert!(!result.status.success());
    assert!(result.stdout.is_empty());
    assert!(stderr(&result).contains("xv init"));
}

#[test]
fn test_short_key_fails() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let result = run_xv(&["enc", "-k", &KEY[..31]], b"data", &key_file);
    assert!(!result.status.success());
    assert!(stderr(&result).contains("at least 32 bytes"));

    let result = run_xv(&["init", &KEY[..31]], b"", &key_file);
    assert!(!result.status.success());
    assert!(!key_file.exists());
}

#[test]
fn test_init_asks_before_overwrite() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");
    let other_key = "d".repeat(40);

    assert_success(&run_xv(&["init", KEY], b"", &key_file), "init");

    let result = run_xv(&["init", &other_key], b"maybe\nn\n", &key_file);
    assert_success(&result, "init");
    assert_eq!(fs::read_to_string(&key_file).unwrap(), KEY);

    let result = run_xv(&["init", &other_key], b"yes\n", &key_file);
    assert_success(&result, "init");
    assert_eq!(fs::read_to_string(&key_file).unwrap(), other_key);

    let result = run_xv(&["init", "--force", KEY], b"", &key_file);
    assert_success(&result, "init");
    assert_eq!(fs::read_to_string(&key_file).unwrap(), KEY);
}

#[test]
fn test_empty_input_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    for subcommand in ["enc", "dec"] {
        let result = run_xv(&[subcommand, "-k", KEY], b" \n\t\n", &key_file);
        assert_success(&result, subcommand);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
    }
}

#[test]
fn test_text_argument() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let encrypted = run_xv_unpiped(&["enc", "-e", "hex", "-k", KEY, "plain text"], &key_file);
    assert_success(&encrypted, "encrypt");

    let hex_text = String::from_utf8(encrypted.stdout).unwrap();
    let decrypted = run_xv_unpiped(&["dec", "-d", "hex", "-k", KEY, &hex_text], &key_file);
    assert_success(&decrypted, "decrypt");
    assert_eq!(decrypted.stdout, b"plain text");
}

#[test]
fn test_piped_stdin_wins_over_text_argument() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let encrypted = run_xv(
        &["enc", "-e", "hex", "-k", KEY, "from arg"],
        b"from stdin",
        &key_file,
    );
    assert_success(&encrypted, "encrypt");

    let decrypted = run_xv(
        &["dec", "-d", "hex", "-k", KEY, "--no-checksum", "not hex"],
        &encrypted.stdout,
        &key_file,
    );
    assert_success(&decrypted, "decrypt");
    assert_eq!(decrypted.stdout, b"from stdin");

    // Piped but empty: still a no-op, the TEXT argument is not used.
    let result = run_xv(&["enc", "-k", KEY, "from arg"], b"", &key_file);
    assert_success(&result, "encrypt");
    assert!(result.stdout.is_empty());
}

#[test]
fn test_unpiped_without_text_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let result = run_xv_unpiped(&["enc", "-k", KEY], &key_file);
    assert_success(&result, "encrypt");
    assert!(result.stdout.is_empty());
}

#[test]
fn test_no_verify_and_no_checksum() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let encrypted = run_xv(&["enc", "--no-verify", "-k", KEY], b"quiet", &key_file);
    assert_success(&encrypted, "encrypt");
    assert!(encrypted.stderr.is_empty());

    let decrypted = run_xv(&["dec", "--no-checksum", "-k", KEY], &encrypted.stdout, &key_file);
    assert_success(&decrypted, "decrypt");
    assert!(decrypted.stderr.is_empty());
    assert_eq!(decrypted.stdout, b"quiet");
}

#[test]
fn test_large_binary_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let key_file = temp_dir.path().join(".xv");

    let large_content: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();

    let encrypted = run_xv(&["enc", "-e", "raw", "-k", KEY], &large_content, &key_file);
    assert_success(&encrypted, "encrypt");

    let decrypted = run_xv(&["dec", "-d", "raw", "-k", KEY], &encrypted.stdout, &key_file);
    assert_success(&decrypted, "decrypt");
    assert_eq!(decrypted.stdout, large_content);
}

/// Get path to testdata directory
fn testdata_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("testdata");
    path.push(filename);
    path
}
