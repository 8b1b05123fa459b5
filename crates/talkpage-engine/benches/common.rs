// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
#[allow(dead_code)]
pub fn generate_talk_page(sections: usize, replies: usize) -> String {
    let mut content = String::from("{{Talk header}}\n{| class=\"wikitable\"\n| Archive || 1\n|}\n\n");

    for section in 0..sections {
        content.push_str(&format!("== Topic {} ==\n", section));
        content.push_str(&format!(
            "Opening {{{{tl|x}}}} <!-- note --> [[User:Opener{section}|Opener]] {}\n",
            timestamp(section, 0)
        ));
        for reply in 1..=replies {
            let indent = ":".repeat(1 + reply % 4);
            content.push_str(&format!(
                "{indent}Reply <nowiki>[[x]]</nowiki> -- [[User:User{reply}|User{reply}]] {}\n",
                timestamp(section, reply)
            ));
        }
        content.push('\n');
    }

    content
}

#[allow(dead_code)]
pub fn timestamp(section: usize, reply: usize) -> String {
    let minutes = section * 60 + reply;
    format!(
        "{:02}:{:02}, {} March 2024 (UTC)",
        (minutes / 60) % 24,
        minutes % 60,
        1 + minutes / (24 * 60)
    )
}
