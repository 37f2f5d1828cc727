use plugforge::storage::WrittenFile;

/// Prints the written-file tree with byte sizes.
pub fn print_file_tree(files: &[WrittenFile]) {
    if files.is_empty() {
        return;
    }
    println!("Generated plugin files:");
    for file in files {
        println!("  {} ({} bytes)", file.path, file.size_bytes);
    }
}

/// Prints the ordered processing-step summary.
pub fn print_summary(steps: &[String], file_count: usize) {
    println!("\n{}", "=".repeat(60));
    println!("Processing steps:");
    for step in steps {
        println!("  {}", step);
    }
    println!("  Files written: {}", file_count);
    println!("{}", "=".repeat(60));
}
