use rstest::rstest;
use schemadiff_cli::{execute, Command, ExecError, ExecOptions};
use schemadiff_engine::EngineError;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile, TempDir};

const SCHEMA_FROM: [&str; 3] = [
    "create table t1 (id int primary key)",
    "create view v1 as select id from t1",
    "create table t2 (id int, name varchar(12), primary key(id), key name_idx(name))",
];
const SCHEMA_TO: [&str; 4] = [
    "create table t1 (id int unsigned primary key)",
    "create view vone as select id from t1",
    "create table t2 (id int, name varchar(12), primary key(id), key name_idx(name))",
    "create table t3 (id int, age int unsigned, primary key(id))",
];

const LOAD_FROM: [&str; 3] = [
    "CREATE TABLE `t1` (\n\t`id` int,\n\tPRIMARY KEY (`id`)\n)",
    "CREATE TABLE `t2` (\n\t`id` int,\n\t`name` varchar(12),\n\tPRIMARY KEY (`id`),\n\tKEY `name_idx` (`name`)\n)",
    "CREATE VIEW `v1` AS SELECT `id` FROM `t1`",
];
const LOAD_TO: [&str; 4] = [
    "CREATE TABLE `t1` (\n\t`id` int unsigned,\n\tPRIMARY KEY (`id`)\n)",
    "CREATE TABLE `t2` (\n\t`id` int,\n\t`name` varchar(12),\n\tPRIMARY KEY (`id`),\n\tKEY `name_idx` (`name`)\n)",
    "CREATE TABLE `t3` (\n\t`id` int,\n\t`age` int unsigned,\n\tPRIMARY KEY (`id`)\n)",
    "CREATE VIEW `vone` AS SELECT `id` FROM `t1`",
];
const DIFFS_FROM_TO: [&str; 4] = [
    "DROP VIEW `v1`",
    "ALTER TABLE `t1` MODIFY COLUMN `id` int unsigned",
    "CREATE TABLE `t3` (\n\t`id` int,\n\t`age` int unsigned,\n\tPRIMARY KEY (`id`)\n)",
    "CREATE VIEW `vone` AS SELECT `id` FROM `t1`",
];
const DIFFS_TO_FROM: [&str; 4] = [
    "DROP VIEW `vone`",
    "DROP TABLE `t3`",
    "ALTER TABLE `t1` MODIFY COLUMN `id` int",
    "CREATE VIEW `v1` AS SELECT `id` FROM `t1`",
];

const MISSING_DIR: &str = "/no/such/directory/to/be/found";

fn multi_statement_text(statements: &[&str]) -> String {
    statements.iter().map(|sql| format!("{sql};\n")).collect()
}

fn schema_file(statements: &[&str]) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    fs::write(file.path(), multi_statement_text(statements)).expect("write schema");
    file
}

fn schema_dir(statements: &[&str]) -> TempDir {
    let dir = tempdir().expect("temp dir");
    for (idx, sql) in statements.iter().enumerate() {
        fs::write(dir.path().join(format!("entity_{idx}.sql")), sql).expect("write entity");
    }
    dir
}

fn descriptor(path: &Path) -> String {
    path.to_str().expect("utf-8 temp path").to_string()
}

async fn exec(command: Command, source: &str, target: &str) -> Result<String, ExecError> {
    execute(command, source, target, &ExecOptions::default()).await
}

async fn exec_textual(command: Command, source: &str, target: &str) -> Result<String, ExecError> {
    let options = ExecOptions {
        textual: true,
        ..ExecOptions::default()
    };
    execute(command, source, target, &options).await
}

/// Sources used by the schema diff cases, kept alive for the whole test.
struct Fixtures {
    file_from: NamedTempFile,
    file_to: NamedTempFile,
    dir_from: TempDir,
    dir_to: TempDir,
    empty: NamedTempFile,
}

impl Fixtures {
    fn new() -> Self {
        Self {
            file_from: schema_file(&SCHEMA_FROM),
            file_to: schema_file(&SCHEMA_TO),
            dir_from: schema_dir(&SCHEMA_FROM),
            dir_to: schema_dir(&SCHEMA_TO),
            empty: schema_file(&[]),
        }
    }

    fn get(&self, name: &str) -> String {
        match name {
            "file-from" => descriptor(self.file_from.path()),
            "file-to" => descriptor(self.file_to.path()),
            "dir-from" => descriptor(self.dir_from.path()),
            "dir-to" => descriptor(self.dir_to.path()),
            "empty" => descriptor(self.empty.path()),
            other => other.to_string(),
        }
    }
}

#[rstest]
#[case("file-from", &LOAD_FROM)]
#[case("dir-from", &LOAD_FROM)]
#[case("file-to", &LOAD_TO)]
#[case("dir-to", &LOAD_TO)]
#[case("empty", &[])]
#[tokio::test]
async fn test_load(#[case] source: &str, #[case] expected: &[&str]) {
    let fixtures = Fixtures::new();
    let output = exec(Command::Load, &fixtures.get(source), "").await.unwrap();
    assert_eq!(output, multi_statement_text(expected));
}

#[tokio::test]
async fn test_load_textual_prefixes_every_line() {
    let fixtures = Fixtures::new();
    let output = exec_textual(Command::Load, &fixtures.get("file-from"), "")
        .await
        .unwrap();
    let expected: Vec<String> = LOAD_FROM
        .iter()
        .map(|sql| {
            sql.split('\n')
                .map(|line| format!("+{line}"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    assert_eq!(output, multi_statement_text(&expected));
}

#[tokio::test]
async fn test_load_ignores_whitespace_padding() {
    let file = NamedTempFile::new().unwrap();
    fs::write(
        file.path(),
        "\n\n   create table t1 (id int primary key)  ;\n\n\n  create view v1 as select id from t1;  \n\n",
    )
    .unwrap();
    let output = exec(Command::Load, &descriptor(file.path()), "").await.unwrap();
    assert_eq!(output.matches(";\n").count(), 2);
}

#[rstest]
#[case::file_file("file-from", "file-to", &DIFFS_FROM_TO)]
#[case::file_dir("file-from", "dir-to", &DIFFS_FROM_TO)]
#[case::dir_file("dir-from", "file-to", &DIFFS_FROM_TO)]
#[case::dir_dir("dir-from", "dir-to", &DIFFS_FROM_TO)]
#[case::file_file_reverse("file-to", "file-from", &DIFFS_TO_FROM)]
#[case::dir_file_reverse("dir-to", "file-from", &DIFFS_TO_FROM)]
#[case::file_dir_reverse("file-to", "dir-from", &DIFFS_TO_FROM)]
#[case::dir_dir_reverse("dir-to", "dir-from", &DIFFS_TO_FROM)]
#[case::empty_from("empty", "file-from", &LOAD_FROM)]
#[case::empty_to("empty", "file-to", &LOAD_TO)]
#[tokio::test]
async fn test_diff(#[case] source: &str, #[case] target: &str, #[case] expected: &[&str]) {
    let fixtures = Fixtures::new();
    let (source, target) = (fixtures.get(source), fixtures.get(target));

    let unordered = exec(Command::Diff, &source, &target).await.unwrap();
    assert_eq!(unordered, multi_statement_text(expected));

    let ordered = exec(Command::OrderedDiff, &source, &target).await.unwrap();
    let mut ordered: Vec<&str> = ordered.split_terminator(";\n").collect();
    let mut expected = expected.to_vec();
    ordered.sort_unstable();
    expected.sort_unstable();
    assert_eq!(ordered, expected);
}

#[rstest]
#[case::dir_nodir("dir-from", MISSING_DIR, "unknown input source")]
#[case::nodir_dir(MISSING_DIR, "dir-to", "unknown input source")]
#[case::same_dir("dir-to", "dir-to", "--source and --target must be different")]
#[case::same_stdin("", "", "--source and --target must be different")]
#[tokio::test]
async fn test_diff_errors(#[case] source: &str, #[case] target: &str, #[case] message: &str) {
    let fixtures = Fixtures::new();
    let (source, target) = (fixtures.get(source), fixtures.get(target));

    for command in [Command::Diff, Command::OrderedDiff] {
        let err = exec(command, &source, &target).await.unwrap_err();
        assert!(
            err.to_string().contains(message),
            "{command}: expected {message:?} in {err}"
        );
    }
}

#[tokio::test]
async fn test_diff_against_identical_copy_is_empty() {
    let fixtures = Fixtures::new();
    let copy = schema_file(&SCHEMA_TO);
    let output = exec(
        Command::Diff,
        &fixtures.get("dir-to"),
        &descriptor(copy.path()),
    )
    .await
    .unwrap();
    assert_eq!(output, "");
}

#[tokio::test]
async fn test_ordered_diff_creates_parents_first() {
    let from = schema_file(&[]);
    let to = schema_file(&[
        "create table a_child (id int, parent_id int, foreign key (parent_id) references z_parent (id))",
        "create table z_parent (id int primary key)",
    ]);
    let output = exec(
        Command::OrderedDiff,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap();
    let parent = output.find("CREATE TABLE `z_parent`").expect("parent created");
    let child = output.find("CREATE TABLE `a_child`").expect("child created");
    assert!(parent < child, "{output}");
}

#[rstest]
#[case::modify(&SCHEMA_FROM[0..1], &SCHEMA_TO[0..1], "ALTER TABLE `t1` MODIFY COLUMN `id` int unsigned;\n")]
#[case::add_column(&SCHEMA_FROM[0..1], &SCHEMA_TO[3..], "ALTER TABLE `t1` ADD COLUMN `age` int unsigned;\n")]
#[case::identical(&SCHEMA_FROM[2..3], &SCHEMA_TO[2..3], "")]
#[tokio::test]
async fn test_diff_table(#[case] from: &[&str], #[case] to: &[&str], #[case] expected: &str) {
    let (from, to) = (schema_file(from), schema_file(to));
    let output = exec(
        Command::DiffTable,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap();
    assert_eq!(output, expected);
}

#[tokio::test]
async fn test_diff_table_textual() {
    let (from, to) = (schema_file(&SCHEMA_FROM[0..1]), schema_file(&SCHEMA_TO[3..]));
    let output = exec_textual(
        Command::DiffTable,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap();
    assert_eq!(
        output,
        " CREATE TABLE `t1` (\n \t`id` int,\n+\t`age` int unsigned,\n \tPRIMARY KEY (`id`)\n );\n"
    );
}

#[tokio::test]
async fn test_diff_table_against_view() {
    let (from, to) = (schema_file(&SCHEMA_FROM[0..1]), schema_file(&SCHEMA_TO[1..2]));
    let err = exec(
        Command::DiffTable,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap_err();
    assert!(
        matches!(err, ExecError::Engine(EngineError::ExpectedCreateTable(_))),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_diff_table_against_whole_schema() {
    let (single, schema) = (schema_file(&SCHEMA_FROM[0..1]), schema_file(&SCHEMA_TO));
    let (single, schema) = (descriptor(single.path()), descriptor(schema.path()));

    for (source, target) in [(&single, &schema), (&schema, &single)] {
        let err = exec(Command::DiffTable, source, target).await.unwrap_err();
        assert!(
            matches!(err, ExecError::StatementCount { found: 4, .. }),
            "got {err:?}"
        );
        assert!(err
            .to_string()
            .contains("expected one CREATE TABLE statement, found 4 entities"));
    }
}

#[tokio::test]
async fn test_diff_view_identical_bodies() {
    let (from, to) = (schema_file(&SCHEMA_FROM[1..2]), schema_file(&SCHEMA_TO[1..2]));
    let output = exec(
        Command::DiffView,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap();
    assert!(output.is_empty(), "{output}");
}

#[tokio::test]
async fn test_diff_view_changed_body() {
    let from = schema_file(&SCHEMA_FROM[1..2]);
    let to = schema_file(&["create view v2 as select id, 1 from t1"]);
    let output = exec(
        Command::DiffView,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap();
    assert_eq!(output, "ALTER VIEW `v1` AS SELECT `id`, 1 FROM `t1`;\n");
}

#[tokio::test]
async fn test_diff_view_arity_names_view() {
    let (from, to) = (schema_file(&SCHEMA_FROM[1..2]), schema_file(&SCHEMA_FROM));
    let err = exec(
        Command::DiffView,
        &descriptor(from.path()),
        &descriptor(to.path()),
    )
    .await
    .unwrap_err();
    assert!(err
        .to_string()
        .starts_with("expected one CREATE VIEW statement, found 3 entities in "));
}

#[tokio::test]
async fn test_invalid_schema_is_engine_error() {
    let file = schema_file(&["create table t1 (id int)", "create table t1 (id bigint)"]);
    let err = exec(Command::Load, &descriptor(file.path()), "").await.unwrap_err();
    assert!(
        matches!(err, ExecError::Engine(EngineError::DuplicateEntity(ref name)) if name == "t1"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_missing_database_name() {
    let err = exec(Command::Load, "root@tcp(127.0.0.1:3306)/", "").await.unwrap_err();
    assert!(matches!(err, ExecError::InvalidArgument(_)), "got {err:?}");
}
