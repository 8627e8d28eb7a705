//! End-to-end runs through a real JDK. Each test returns early when javac or
//! java is not on PATH.

use std::{fs, path::PathBuf, time::Duration};

use automark::{
    DetailFlags, ExecHarness, HarnessConfig, ResultCode, constants::keys, is_toolchain_available,
};
use uuid::Uuid;

fn jdk() -> bool {
    let found = is_toolchain_available("javac") && is_toolchain_available("java");
    if !found {
        eprintln!("skipping: javac/java not on PATH");
    }
    found
}

fn temp_workspace() -> PathBuf {
    std::env::temp_dir().join(format!("automark-java-{}", Uuid::new_v4()))
}

fn harness(ws: &PathBuf, limit: Duration) -> ExecHarness {
    ExecHarness::new(
        HarnessConfig::builder()
            .workspace(ws.clone())
            .time_limit(limit)
            .build(),
    )
}

#[tokio::test]
async fn prints_the_sum() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(3));

    let submission = harness.submit(
        "public class Main{public static void main(String[] a){System.out.println(10+11+12);}}",
        "Main",
        "",
    )?;
    let status = harness.wait(&submission).await;
    assert_eq!(status.result(), Some(ResultCode::Success));

    let details = harness.poll_details(&submission, DetailFlags::builder().with_output(true).build());
    assert_eq!(details.output().map(str::trim), Some("33"));
    let time = details.time().unwrap();
    assert!((0.0..=3.0).contains(&time), "{time}");
    assert_eq!(details.get_i64(keys::SIGNAL), Some(0));

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn reads_stdin() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(3));

    let source = r#"
import java.util.Scanner;

public class CourseworkTask1 {
    public static void main(String[] args) {
        Scanner in = new Scanner(System.in);
        int total = 0;
        while (in.hasNextInt()) {
            total += in.nextInt();
        }
        System.out.println("Total: " + total);
    }
}
"#;
    let submission = harness.submit(source, "CourseworkTask1", "10\n11\n12\n")?;
    harness.wait(&submission).await;

    let details = harness.poll_details(&submission, DetailFlags::all());
    assert_eq!(details.result(), Some(ResultCode::Success));
    assert_eq!(details.output(), Some("Total: 33\n"));
    assert_eq!(details.get_str(keys::INPUT), Some("10\n11\n12\n"));

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn syntax_error_fails_compilation_with_line_number() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(3));

    let source = "public class Main {\n    public static void main(String[] a) {\n        int x = \
                  1\n        System.out.println(x);\n    }\n}\n";
    let submission = harness.submit(source, "Main", "")?;
    let status = harness.wait(&submission).await;
    assert_eq!(status.result(), Some(ResultCode::CompileFailed));

    let details = harness.poll_details(
        &submission,
        DetailFlags::builder()
            .with_cmpinfo(true)
            .with_output(true)
            .build(),
    );
    let cmpinfo = details.cmpinfo().unwrap();
    assert!(!cmpinfo.is_empty());
    assert!(cmpinfo.contains("Main.java:3"), "{cmpinfo}");
    assert_eq!(details.output(), Some(""));

    let diags = submission.compile_diagnostics();
    assert!(diags.iter().any(|d| d.line_number() == 3 && d.severity().is_error()));

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn infinite_loop_hits_the_time_limit() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let limit = Duration::from_secs(2);
    let harness = harness(&ws, limit);

    let submission = harness.submit(
        "public class Main{public static void main(String[] a){while(true){}}}",
        "Main",
        "",
    )?;
    let status = harness.wait(&submission).await;
    assert_eq!(status.result(), Some(ResultCode::TimeLimitExceeded));

    let time = harness
        .poll_details(&submission, DetailFlags::default())
        .time()
        .unwrap();
    assert!(time >= limit.as_secs_f64(), "{time}");
    assert!(time <= limit.as_secs_f64() + 0.5, "{time}");
    let state = submission.state();
    assert!(state.timed_out());

    // the JVM was killed and reaped, not left running in the background
    let execution = state.execution().unwrap();
    assert_eq!(execution.code, 9);
    #[cfg(target_os = "linux")]
    {
        let pid = execution.pid.unwrap();
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists(), "{pid}");
    }

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn uncaught_exception_is_a_runtime_error() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(3));

    let source = "public class Main {\n    public static void main(String[] a) {\n        int[] \
                  xs = new int[2];\n        System.out.println(xs[5]);\n    }\n}\n";
    let submission = harness.submit(source, "Main", "")?;
    let status = harness.wait(&submission).await;
    assert_eq!(status.result(), Some(ResultCode::RuntimeError));

    let details = harness.poll_details(&submission, DetailFlags::builder().with_stderr(true).build());
    let stderr = details.stderr().unwrap();
    assert!(stderr.contains("ArrayIndexOutOfBoundsException"), "{stderr}");
    assert_ne!(details.get_i64(keys::SIGNAL), Some(0));
    assert!(
        submission
            .runtime_line_refs()
            .iter()
            .any(|r| r.file_name() == "Main" && r.line_number == 4)
    );

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn exit_code_is_reported() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(3));

    let submission = harness.submit(
        "public class Main{public static void main(String[] a){System.err.println(\"bye\");\
         System.exit(3);}}",
        "Main",
        "",
    )?;
    harness.wait(&submission).await;

    let details = harness.poll_details(&submission, DetailFlags::all());
    assert_eq!(details.result(), Some(ResultCode::RuntimeError));
    assert_eq!(details.get_i64(keys::SIGNAL), Some(3));
    assert_eq!(details.stderr().map(str::trim), Some("bye"));

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn second_submission_never_sees_first_classes() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(3));

    let first = harness.submit(
        "public class First{public static void main(String[] a){System.out.println(1);}}",
        "First",
        "",
    )?;
    harness.wait(&first).await;
    assert!(ws.join("First.class").exists());

    let second = harness.submit(
        "public class Second{public static void main(String[] a){System.out.println(2);}}",
        "Second",
        "",
    )?;
    assert!(!ws.join("First.class").exists());
    harness.wait(&second).await;
    assert!(ws.join("Second.class").exists());
    assert!(!ws.join("First.class").exists());

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn separate_workspaces_run_concurrently() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let (ws_a, ws_b) = (temp_workspace(), temp_workspace());
    let a = harness(&ws_a, Duration::from_secs(5));
    let b = harness(&ws_b, Duration::from_secs(5));

    let sub_a = a.submit(
        "public class Main{public static void main(String[] x){System.out.println(\"a\");}}",
        "Main",
        "",
    )?;
    let sub_b = b.submit(
        "public class Main{public static void main(String[] x){System.out.println(\"b\");}}",
        "Main",
        "",
    )?;
    let (done_a, done_b) = tokio::join!(a.wait(&sub_a), b.wait(&sub_b));
    assert_eq!(done_a.result(), Some(ResultCode::Success));
    assert_eq!(done_b.result(), Some(ResultCode::Success));

    let flags = DetailFlags::builder().with_output(true).build();
    assert_eq!(a.poll_details(&sub_a, flags).output(), Some("a\n"));
    assert_eq!(b.poll_details(&sub_b, flags).output(), Some("b\n"));

    fs::remove_dir_all(ws_a)?;
    fs::remove_dir_all(ws_b)?;
    Ok(())
}

#[tokio::test]
async fn missing_runtime_keeps_compiler_output() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = ExecHarness::new(
        HarnessConfig::builder()
            .workspace(ws.clone())
            .runtime("automark-missing-java")
            .build(),
    );

    // a deprecation warning gives javac something to say on success
    let source = "public class Main {\n    public static void main(String[] a) {\n        \
                  Integer boxed = new Integer(33);\n        System.out.println(boxed);\n    \
                  }\n}\n";
    let submission = harness.submit(source, "Main", "")?;
    let status = harness.wait(&submission).await;
    assert_eq!(status.result(), Some(ResultCode::ToolchainMissing));
    assert!(!ResultCode::ToolchainMissing.compiled());

    let state = submission.state();
    let compile = state.compile().unwrap();
    assert!(compile.success());
    assert!(state.execution().is_none());
    assert!(ws.join("Main.class").exists());

    let details = harness.poll_details(&submission, DetailFlags::all());
    let cmpinfo = details.cmpinfo().unwrap();
    assert!(cmpinfo.starts_with(compile.output.as_str()), "{cmpinfo}");
    assert!(
        cmpinfo.ends_with("Java VM automark-missing-java could not be found"),
        "{cmpinfo}"
    );
    assert_eq!(details.output(), Some(""));
    assert_eq!(details.time(), Some(0.0));

    fs::remove_dir_all(ws)?;
    Ok(())
}

#[tokio::test]
async fn oversized_time_limit_still_finishes() -> anyhow::Result<()> {
    if !jdk() {
        return Ok(());
    }
    let ws = temp_workspace();
    let harness = harness(&ws, Duration::from_secs(u64::MAX / 2));

    let submission = harness.submit(
        "public class Main{public static void main(String[] a){System.out.println(33);}}",
        "Main",
        "",
    )?;
    let status = tokio::time::timeout(Duration::from_secs(60), harness.wait(&submission)).await?;
    assert_eq!(status.result(), Some(ResultCode::Success));
    assert!(status.result().unwrap().compiled());

    fs::remove_dir_all(ws)?;
    Ok(())
}
