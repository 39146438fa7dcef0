use indicatif::{ProgressBar, ProgressStyle};

/// Count bar used by every fan-out stage; `message` names the unit being resolved
pub fn create_count_progress_bar(total_items: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total_items);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("Failed to create progress style")
            .progress_chars("#>-")
    );
    pb.set_message(message.to_string());
    pb
}
