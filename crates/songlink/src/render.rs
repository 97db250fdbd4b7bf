//! Text rendering of the playlist log.
use songlink_common::{Chain, LogEntry};
use time::format_description::well_known::Rfc2822;

/// Renders `entries`, given oldest first, as a newest first listing headed by
/// the number of playlists.
pub fn render_entries(entries: &[LogEntry], chain: &Chain) -> String {
    let mut out = format!("Total Number of Playlist: {}\n", entries.len());

    for entry in entries.iter().rev() {
        out.push('\n');
        out.push_str(&render_entry(entry, chain));
    }

    out
}

pub fn render_entry(entry: &LogEntry, chain: &Chain) -> String {
    format!(
        "{url}\n  Address: {sender}\n  Time: {time}\n  Explorer: {link}\n",
        url = entry.url,
        sender = entry.sender,
        time = format_time(entry),
        link = chain.address_link(&entry.sender),
    )
}

fn format_time(entry: &LogEntry) -> String {
    entry
        .submitted_at
        .format(&Rfc2822)
        .unwrap_or_else(|_| entry.submitted_at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    fn entry(byte: u8, timestamp: i64, url: &str) -> LogEntry {
        LogEntry::from_unix(Address::repeat_byte(byte), timestamp, url.to_owned()).unwrap()
    }

    #[test]
    fn single_entry() {
        let rendered = render_entry(
            &entry(0x11, 1_640_995_200, "https://open.spotify.com/embed/playlist/a"),
            &Chain::Rinkeby,
        );

        let address = Address::repeat_byte(0x11);
        assert_eq!(
            rendered,
            format!(
                "https://open.spotify.com/embed/playlist/a
  Address: {address}
  Time: Sat, 01 Jan 2022 00:00:00 +0000
  Explorer: https://rinkeby.etherscan.io/address/{address}
"
            )
        );
    }

    #[test]
    fn newest_first_without_touching_input() {
        let entries = vec![entry(1, 1, "a"), entry(2, 2, "b"), entry(3, 3, "c")];
        let before = entries.clone();

        let rendered = render_entries(&entries, &Chain::Mainnet);

        assert_eq!(entries, before);
        assert!(rendered.starts_with("Total Number of Playlist: 3\n"));
        let order: Vec<&str> = rendered
            .lines()
            .filter(|l| matches!(*l, "a" | "b" | "c"))
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn empty() {
        assert_eq!(
            render_entries(&[], &Chain::Sepolia),
            "Total Number of Playlist: 0\n"
        );
    }
}
