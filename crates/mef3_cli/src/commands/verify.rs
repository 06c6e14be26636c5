//! Verify command implementation.

use mef3_core::{
    read_segment_index, read_segment_metadata, read_segment_samples, IndexRecord,
    SegmentMetadata, SegmentPaths,
};

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of checks run.
    pub checks: usize,
    /// Number of checks that passed.
    pub passed: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            checks: 0,
            passed: 0,
            errors: Vec::new(),
        }
    }

    fn check(&mut self, name: &str, outcome: Result<(), String>) {
        self.checks += 1;
        match outcome {
            Ok(()) => self.passed += 1,
            Err(e) => self.errors.push(format!("{name}: {e}")),
        }
    }

    /// Whether every check passed.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks every file of a segment and their mutual consistency.
pub fn verify(paths: &SegmentPaths) -> VerifyResult {
    let mut result = VerifyResult::new();

    let metadata = match read_segment_metadata(paths) {
        Ok(metadata) => {
            result.check("metadata", Ok(()));
            metadata
        }
        Err(e) => {
            result.check("metadata", Err(e.to_string()));
            return result;
        }
    };

    let records = match read_segment_index(paths) {
        Ok((_, records)) => {
            result.check("index", Ok(()));
            records
        }
        Err(e) => {
            result.check("index", Err(e.to_string()));
            return result;
        }
    };

    let samples = read_segment_samples(paths).map_err(|e| e.to_string());
    let sample_count = samples.as_ref().ok().map(Vec::len);
    result.check("data", samples.map(|_| ()));
    result.check("summary", check_summary(&metadata, &records, sample_count));

    result
}

fn check_summary(
    metadata: &SegmentMetadata,
    records: &[IndexRecord],
    decoded_samples: Option<usize>,
) -> Result<(), String> {
    let s2 = &metadata.section2;
    let indexed: i64 = records.iter().map(|r| i64::from(r.number_of_samples)).sum();
    if s2.number_of_samples != indexed {
        return Err(format!(
            "metadata records {} samples, index holds {}",
            s2.number_of_samples, indexed
        ));
    }
    // None when the data check already failed
    if let Some(decoded) = decoded_samples {
        if decoded as i64 != indexed {
            return Err(format!("decoded {decoded} samples, index holds {indexed}"));
        }
    }
    if s2.number_of_blocks != records.len() as i64 {
        return Err(format!(
            "metadata records {} blocks, index holds {}",
            s2.number_of_blocks,
            records.len()
        ));
    }
    let max_bytes = records.iter().map(|r| i64::from(r.block_bytes)).max().unwrap_or(0);
    if s2.maximum_block_bytes != max_bytes {
        return Err(format!(
            "metadata records maximum block of {} bytes, index has {}",
            s2.maximum_block_bytes, max_bytes
        ));
    }
    Ok(())
}

/// Runs the verify command.
pub fn run(paths: &SegmentPaths) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying segment at {:?}", paths.segment_dir());
    println!();

    let result = verify(paths);
    println!("  Checks: {}", result.checks);
    println!("  Passed: {}", result.passed);
    for error in &result.errors {
        println!("  Error:  {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Segment verification passed");
        Ok(())
    } else {
        println!("✗ Segment verification failed");
        Err("Verification failed".into())
    }
}
