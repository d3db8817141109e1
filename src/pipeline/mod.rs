pub mod block_writer;
pub mod overlap_resolver;


use crate::{
    core::variant::{Call, IndelCall, SiteCall},
    utils::util::Result,
};

/// A synchronous push stage of the call pipeline.
///
/// Each call may forward any number of records to the next stage before
/// returning. `flush` drains everything still held and must be called once at
/// the end of every region.
pub trait VariantSink {
    fn process_site(&mut self, site: SiteCall) -> Result<()>;

    fn process_indel(&mut self, indel: IndelCall) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    fn process(&mut self, call: Call) -> Result<()> {
        match call {
            Call::Site(site) => self.process_site(site),
            Call::Indel(indel) => self.process_indel(indel),
        }
    }
}

/// Records every call it receives, for inspecting stage output.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub calls: Vec<Call>,
    pub flush_count: usize,
}

#[cfg(test)]
impl VariantSink for CollectingSink {
    fn process_site(&mut self, site: SiteCall) -> Result<()> {
        self.calls.push(Call::Site(site));
        Ok(())
    }

    fn process_indel(&mut self, indel: IndelCall) -> Result<()> {
        self.calls.push(Call::Indel(indel));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flush_count += 1;
        Ok(())
    }
}
