use super::ShellTest;

/// Shell behavior checks run against a fresh session.
///
/// The directory round trip proves shell state (cwd, exported variables)
/// persists across history-sourced dispatches.
pub fn builtin_suite() -> Vec<ShellTest> {
    vec![
        ShellTest::new("Check whoami", "whoami").exit(0),
        ShellTest::new("Check working directory", "pwd").exit(0),
        ShellTest::new("Nonexist. file list (stderr test)", "ls /nonexistent")
            .exit(2)
            .stderr("No such file"),
        // directory creation, cd, removal
        ShellTest::new("Create directory testdir", "mkdir -p testdir").exit(0),
        ShellTest::new("Change into testdir", "cd testdir").exit(0),
        ShellTest::new("Print pwd inside testdir", "basename $(pwd)")
            .exit(0)
            .stdout("testdir"),
        ShellTest::new("Return to parent directory", "cd ..").exit(0),
        ShellTest::new("Remove testdir", "rmdir testdir").exit(0),
        ShellTest::new("Print pwd after return", "pwd").exit(0),
        // variables
        ShellTest::new("Export env variable MYVAR", r#"export MYVAR="hello world""#).exit(0),
        ShellTest::new("Echo env variable MYVAR", "echo $MYVAR")
            .exit(0)
            .stdout("hello world"),
        // redirection
        ShellTest::new("Stdout redirect test", r#"echo "This is stdout" > out.txt"#).exit(0),
        ShellTest::new("Stderr test", r#"echo "This is stderr" 1>&2"#)
            .exit(0)
            .stderr("This is stderr"),
        ShellTest::new("Read stdout file", "cat out.txt")
            .exit(0)
            .stdout("This is stdout"),
        ShellTest::new("Remove stdout file", "rm out.txt").exit(0),
        // exit status
        ShellTest::new("Command with failure exit status", "grep 'needle' /dev/null").exit(1),
    ]
}
