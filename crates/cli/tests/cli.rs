use assert_cmd::Command;
use tempfile::TempDir;

fn cli(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("bookstore-cli").unwrap();
    let url = format!(
        "sqlite://{}?mode=rwc",
        workdir.path().join("bookstore.db").display()
    );
    cmd.current_dir(workdir.path())
        .env("BOOKSTORE_ENV", "local")
        .env("BOOKSTORE_CONFIG_DIR", workdir.path())
        .env("BOOKSTORE_DATABASE__URL", url)
        .env_remove("RUST_LOG");
    cmd
}

fn stdout(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn help_lists_commands() {
    let workdir = TempDir::new().unwrap();
    let text = stdout(cli(&workdir).arg("--help"));

    for command in ["serve", "migrate", "author", "publisher"] {
        assert!(text.contains(command), "missing {command} in:\n{text}");
    }
}

#[test]
fn migrate_is_idempotent() {
    let workdir = TempDir::new().unwrap();

    assert_eq!(stdout(cli(&workdir).arg("migrate")).trim(), "applied 1 migration(s)");
    assert_eq!(stdout(cli(&workdir).arg("migrate")).trim(), "applied 0 migration(s)");
}

#[test]
fn added_reference_data_is_listed() {
    let workdir = TempDir::new().unwrap();
    cli(&workdir).arg("migrate").assert().success();

    let author_id = stdout(cli(&workdir).args([
        "author",
        "add",
        "--name",
        "Clarice Lispector",
        "--nationality",
        "Brazilian",
    ]));
    let publisher_id = stdout(cli(&workdir).args(["publisher", "add", "--name", "Rocco"]));

    let authors = stdout(cli(&workdir).args(["author", "list"]));
    assert_eq!(
        authors.trim(),
        format!("{}\tClarice Lispector\tBrazilian", author_id.trim())
    );
    let publishers = stdout(cli(&workdir).args(["publisher", "list"]));
    assert_eq!(publishers.trim(), format!("{}\tRocco", publisher_id.trim()));
}

#[test]
fn duplicate_author_name_fails() {
    let workdir = TempDir::new().unwrap();
    cli(&workdir).arg("migrate").assert().success();

    let add = ["author", "add", "--name", "Machado de Assis", "--nationality", "Brazilian"];
    cli(&workdir).args(add).assert().success();
    cli(&workdir).args(add).assert().failure();
}
