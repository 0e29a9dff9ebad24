//! Recorded command trace produced by executing a frame graph.

use std::fmt;

/// How a pass touches a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    ComputeRead,
    ComputeWrite,
    TransferRead,
    TransferWrite,
}

impl Access {
    pub fn read(compute: bool) -> Self {
        if compute {
            Access::ComputeRead
        } else {
            Access::TransferRead
        }
    }

    pub fn write(compute: bool) -> Self {
        if compute {
            Access::ComputeWrite
        } else {
            Access::TransferWrite
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, Access::ComputeWrite | Access::TransferWrite)
    }
}

/// Layout an image level is in while a pass touches it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    ShaderRead,
    ShaderWrite,
    TransferDst,
}

/// Resource named in a barrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Buffer(String),
    Image(String),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Buffer(label) => write!(f, "buffer '{}'", label),
            ResourceRef::Image(label) => write!(f, "image '{}'", label),
        }
    }
}

/// Memory dependency between an earlier and a later access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barrier {
    pub resource: ResourceRef,
    pub src: Access,
    pub dst: Access,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start of a pass's recorded work
    BeginPass { name: String, compute: bool },
    Barrier(Barrier),
    /// Layout change of a single mip level
    ImageTransition {
        image: String,
        level: u32,
        from: ImageLayout,
        to: ImageLayout,
    },
    /// A kernel launch over `groups` work items
    Dispatch { kernel: &'static str, groups: u32 },
    /// Buffer or image copy
    Copy { from: String, to: String },
}

/// Everything recorded during one graph execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        log::trace!("{:?}", command);
        self.commands.push(command);
    }

    pub fn transition(&mut self, image: &str, level: u32, from: ImageLayout, to: ImageLayout) {
        self.push(Command::ImageTransition {
            image: image.to_string(),
            level,
            from,
            to,
        });
    }

    /// Launch over `work_items` items; counts past `u32::MAX` saturate
    pub fn dispatch(&mut self, kernel: &'static str, work_items: usize) {
        let groups = u32::try_from(work_items).unwrap_or(u32::MAX);
        self.push(Command::Dispatch { kernel, groups });
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Names of the passes recorded, in order
    pub fn pass_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::BeginPass { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Barriers recorded for a resource
    pub fn barriers_for(&self, resource: &ResourceRef) -> Vec<&Barrier> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Barrier(barrier) if &barrier.resource == resource => Some(barrier),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_kinds() {
        assert_eq!(Access::read(true), Access::ComputeRead);
        assert_eq!(Access::write(false), Access::TransferWrite);
        assert!(Access::ComputeWrite.is_write());
        assert!(!Access::TransferRead.is_write());
    }

    #[test]
    fn test_pass_names_skip_other_commands() {
        let mut commands = CommandBuffer::new();
        commands.push(Command::BeginPass {
            name: "a".into(),
            compute: true,
        });
        commands.dispatch("kernel", 4);
        commands.push(Command::BeginPass {
            name: "b".into(),
            compute: false,
        });

        assert_eq!(commands.pass_names(), vec!["a", "b"]);
        assert_eq!(commands.len(), 3);
    }

    #[test]
    fn test_dispatch_counts_saturate() {
        let mut commands = CommandBuffer::new();
        commands.dispatch("small", 1 << 20);
        commands.dispatch("huge", usize::MAX);

        assert_eq!(
            commands.commands(),
            &[
                Command::Dispatch {
                    kernel: "small",
                    groups: 1 << 20
                },
                Command::Dispatch {
                    kernel: "huge",
                    groups: u32::MAX
                },
            ]
        );
    }
}
