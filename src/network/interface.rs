use crate::{error::LeasedError, transaction::InterfaceDescriptor};
use std::path::Path;

/// Parses a MAC address string (e.g., "0a:1b:2c:3d:4e:5f").
pub fn parse_mac_address(mac_str: &str) -> Result<[u8; 6], LeasedError> {
    let invalid = || LeasedError::MacParse(mac_str.to_string());

    let mut mac = [0u8; 6];
    let mut parts = mac_str.trim().split(':');
    for byte in mac.iter_mut() {
        let part = parts.next().ok_or_else(invalid)?;
        if part.len() != 2 {
            return Err(invalid());
        }
        *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }
    Ok(mac)
}

/// Builds the descriptor of an interface from sysfs.
pub async fn read_interface(name: &str) -> Result<InterfaceDescriptor, LeasedError> {
    read_interface_from(Path::new("/sys/class/net"), name).await
}

async fn read_interface_from(
    sysfs_root: &Path,
    name: &str,
) -> Result<InterfaceDescriptor, LeasedError> {
    let mac_path = sysfs_root.join(name).join("address");
    let mac_str = tokio::fs::read_to_string(&mac_path)
        .await
        .map_err(|_| LeasedError::InterfaceInvalid(name.to_string()))?;
    let mac = parse_mac_address(&mac_str)?;
    if mac == [0u8; 6] {
        return Err(LeasedError::InterfaceInvalid(name.to_string()));
    }

    tracing::debug!("Found MAC address {} for {}", mac_str.trim(), name);
    Ok(InterfaceDescriptor::new(name, mac))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_mac_address() {
        let mac = assert_ok!(parse_mac_address("52:54:00:12:34:56\n"));
        assert_eq!(mac, [0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn test_parse_mac_address_rejects_malformed() {
        assert_err!(parse_mac_address("52:54:00:12:34"));
        assert_err!(parse_mac_address("52:54:00:12:34:56:78"));
        assert_err!(parse_mac_address("52:54:00:12:34:zz"));
        assert_err!(parse_mac_address("5254:00:12:34:56"));
    }

    #[tokio::test]
    async fn test_read_interface_from_sysfs() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("eth0");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("address"), "52:54:00:12:34:56\n")
            .await
            .unwrap();

        let iface = read_interface_from(root.path(), "eth0").await.unwrap();
        assert_eq!(iface.name, "eth0");
        assert_eq!(iface.mac_address, [0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);

        assert!(matches!(
            read_interface_from(root.path(), "missing0").await,
            Err(LeasedError::InterfaceInvalid(name)) if name == "missing0"
        ));
    }
}
