use patchscan::{parse, BinaryHunk, Diff, FileMode, FileOp, Patch};

/// Prints every event the scanner emits, one file section at a time.
#[derive(Default)]
struct Report {
    files: usize,
    hunks: usize,
}

impl Diff for Report {
    fn set_info(
        &mut self,
        old_name: &[u8],
        new_name: &[u8],
        op: FileOp,
        binary_sizes: Option<Vec<BinaryHunk>>,
        file_mode: Option<FileMode>,
    ) {
        self.files += 1;
        println!("=== File Change ===");
        println!("Old: {}", String::from_utf8_lossy(old_name));
        println!("New: {}", String::from_utf8_lossy(new_name));
        println!("Op:  {}", op);
        if let Some(mode) = file_mode {
            println!("Mode: {:o} -> {:o}", mode.old, mode.new);
        }
        if let Some(sizes) = binary_sizes {
            for hunk in sizes {
                println!("Binary {:?} of {} bytes", hunk.kind, hunk.size);
            }
        }
    }

    fn add_line(&mut self, old_line: u32, new_line: u32, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        match (old_line, new_line) {
            (old, 0) => println!("  {:>4}      -{}", old, text),
            (0, new) => println!("       {:>4} +{}", new, text),
            (old, new) => println!("  {:>4} {:>4}  {}", old, new, text),
        }
    }

    fn new_hunk(&mut self) {
        self.hunks += 1;
        println!("--- Hunk ---");
    }

    fn close(&mut self) {
        println!();
    }
}

#[derive(Default)]
struct Summary {
    report: Report,
}

impl Patch for Summary {
    fn new_diff(&mut self) -> &mut dyn Diff {
        &mut self.report
    }

    fn close(&mut self) {
        println!(
            "Parsed {} file(s), {} hunk(s) total.",
            self.report.files, self.report.hunks
        );
    }
}

fn main() {
    env_logger::init();

    let patch_text = r#"diff --git a/src/main.rs b/src/main.rs
index 1111111..2222222 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,4 +1,5 @@
 fn main() {
-    println!("Hello, world!");
+    println!("Hello, Rust!");
+    println!("This is a patched version.");
 }

diff --git a/run.sh b/run.sh
old mode 100644
new mode 100755
diff --git a/README b/README.md
rename from README
rename to README.md
"#;

    let patch_bytes = std::env::args()
        .nth(1)
        .map(|path| std::fs::read(path).expect("cannot read patch file"))
        .unwrap_or_else(|| patch_text.as_bytes().to_vec());

    let mut summary = Summary::default();
    if let Err(err) = parse(&patch_bytes, &mut summary) {
        eprintln!("Parse error: {}", err);
        std::process::exit(1);
    }
}
