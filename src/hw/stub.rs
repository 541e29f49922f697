use super::{Component, ComponentKind, Driver, DriverResult, DriverStatus};

/// Driver for builds without the codec block. Every query says "absent".
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableDriver;

impl Driver for UnavailableDriver {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn create_component(&self, kind: ComponentKind) -> DriverResult<Box<dyn Component>> {
        log::warn!("No codec block present, cannot create {}", kind.name());
        Err(DriverStatus::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_available() {
        let driver = UnavailableDriver;
        assert!(!driver.is_available());
        assert_eq!(
            driver.create_component(ComponentKind::VideoDecoder).err(),
            Some(DriverStatus::NotFound)
        );
    }
}
