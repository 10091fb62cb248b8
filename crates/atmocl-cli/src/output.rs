//! Listing lines and numbered selection.

use atmocl_core::{App, Image, Instance, Volume};

/// Number `items` from 1: `1. first`, `2. second`, ...
pub fn numbered<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_ref()))
        .collect()
}

/// Turn a typed answer into an index into a list of `len` entries.
///
/// Answers are 1-based; anything else yields `None`.
pub fn parse_selection(answer: &str, len: usize) -> Option<usize> {
    let n: usize = answer.trim().parse().ok()?;
    (1..=len).contains(&n).then(|| n - 1)
}

/// One volume listing entry: id, name, size and status, plus its
/// placement when attached.
pub fn volume_line(volume: &Volume) -> String {
    let mut line = format!(
        "{}  \"{}\"  {} GB  {}",
        volume.id, volume.name, volume.size, volume.status
    );
    if volume.is_attached() {
        let instance = volume
            .attached_instance_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or("unknown instance");
        line.push_str(&format!("  on {instance}"));
        if let Some(device) = volume.attached_device.as_deref() {
            line.push_str(&format!(" at {device}"));
        }
    }
    line
}

/// One instance listing entry: id, name, state and public DNS name if known.
pub fn instance_line(instance: &Instance) -> String {
    let mut line = format!("{}  \"{}\"  {}", instance.id, instance.name, instance.state);
    if let Some(dns) = instance.public_dns_name.as_deref() {
        line.push_str(&format!("  {dns}"));
    }
    line
}

/// One image listing entry.
pub fn image_line(image: &Image) -> String {
    format!("{}  \"{}\"", image.id, image.name)
}

/// One application listing entry, with the machine image it launches.
pub fn app_line(app: &App) -> String {
    match app.machine_image_id.as_deref() {
        Some(image) => format!("{}  \"{}\"  ({image})", app.id, app.name),
        None => format!("{}  \"{}\"", app.id, app.name),
    }
}

/// Image names are typed with underscores in place of spaces.
pub fn image_name_from_arg(arg: &str) -> String {
    arg.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use atmocl_core::VolumeId;

    fn volume() -> Volume {
        Volume {
            id: VolumeId::parse("vol-0000abcd").unwrap(),
            name: "data".to_string(),
            tags: String::new(),
            description: String::new(),
            status: "in-use".to_string(),
            size: 10,
            create_time: String::new(),
            attached_device: Some("/dev/sdb".to_string()),
            attached_instance_id: Some("i-12345678".to_string()),
            attach_time: None,
            snapshot_id: None,
            num: 1,
        }
    }

    #[test]
    fn numbering_starts_at_one() {
        assert_eq!(numbered(["a", "b"]), ["1. a", "2. b"]);
        assert!(numbered(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn selection_bounds() {
        assert_eq!(parse_selection("1", 3), Some(0));
        assert_eq!(parse_selection(" 3\n", 3), Some(2));
        assert_eq!(parse_selection("0", 3), None);
        assert_eq!(parse_selection("4", 3), None);
        assert_eq!(parse_selection("two", 3), None);
        assert_eq!(parse_selection("1", 0), None);
    }

    #[test]
    fn attached_volume_shows_placement() {
        assert_eq!(
            volume_line(&volume()),
            "vol-0000abcd  \"data\"  10 GB  in-use  on i-12345678 at /dev/sdb"
        );

        let mut free = volume();
        free.status = "available".to_string();
        free.attached_instance_id = None;
        assert_eq!(volume_line(&free), "vol-0000abcd  \"data\"  10 GB  available");

        let mut in_use = volume();
        in_use.attached_instance_id = Some(String::new());
        in_use.attached_device = None;
        assert_eq!(
            volume_line(&in_use),
            "vol-0000abcd  \"data\"  10 GB  in-use  on unknown instance"
        );
    }

    #[test]
    fn underscores_become_spaces() {
        assert_eq!(image_name_from_arg("Ubuntu_10.04_Base"), "Ubuntu 10.04 Base");
    }
}
