// Colored terminal output for the pending queue.
//
// main.rs display functions delegate here.

use colored::Colorize;

use super::{external_links, truncate_chars, LinkLabel};
use crate::model::Post;

const PREVIEW_CHARS: usize = 140;

/// Display the pending queue with replies indented under their post.
pub fn display_queue(posts: &[Post]) {
    if posts.is_empty() {
        println!("No tweets to send. Sync a post from the timeline or run `tweetsync extract`.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Pending Queue ({} posts) ===", posts.len()).bold()
    );
    println!();

    for (i, post) in posts.iter().enumerate() {
        let kind = if post.replies.is_empty() {
            "post".normal()
        } else {
            format!("thread of {}", post.editor_count()).cyan()
        };
        println!(
            "  {:>3}. [{}] {} {}",
            i,
            post.timestamp.format("%m-%d %H:%M").to_string().dimmed(),
            post.tweet_id.bold(),
            kind,
        );
        print_body(post, 7);

        for (j, reply) in post.replies.iter().enumerate() {
            println!("       {} {}", format!("↳ {j}.").dimmed(), reply.tweet_id);
            print_body(reply, 10);
        }
        println!();
    }
}

fn print_body(post: &Post, indent: usize) {
    let pad = " ".repeat(indent);
    let preview = truncate_chars(&post.text.replace('\n', " "), PREVIEW_CHARS);
    println!("{pad}{}", preview);

    if !post.images.is_empty() {
        println!("{pad}{} {} image(s)", "img".yellow(), post.images.len());
    }

    let links = external_links(&post.links);
    if !links.is_empty() {
        let rendered: Vec<String> = links
            .iter()
            .map(|label| match label {
                LinkLabel::Host(host) => host.blue().to_string(),
                LinkLabel::Invalid(text) => text.red().to_string(),
            })
            .collect();
        println!("{pad}{} {}", "links".dimmed(), rendered.join(", "));
    }
}
