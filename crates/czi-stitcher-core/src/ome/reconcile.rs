use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

use super::metadata::OmeMetadata;

/// Identity written into an `<Experimenter>` record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimenterIdentity {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub institution: String,
}

impl ExperimenterIdentity {
    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
            && self.first_name.is_empty()
            && self.last_name.is_empty()
            && self.institution.is_empty()
    }
}

/// A metadata rewrite applied to the merged output's tree, in list order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetadataTransform {
    AttachExperimenter {
        identity: ExperimenterIdentity,
        #[serde(default)]
        index: usize,
    },
    CollapseFilterSets,
}

impl MetadataTransform {
    pub fn apply(&self, mut metadata: OmeMetadata) -> OmeMetadata {
        match self {
            Self::AttachExperimenter { identity, index } => {
                attach_experimenter(&mut metadata, identity, *index);
            }
            Self::CollapseFilterSets => {
                let summary = collapse_filter_sets(&mut metadata);
                info!(
                    filter_sets = summary.filter_sets_removed,
                    dichroics = summary.dichroics_removed,
                    filters = summary.filters_removed,
                    "Collapsed duplicated filter sets"
                );
            }
        }
        metadata
    }
}

impl std::fmt::Display for MetadataTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AttachExperimenter { index, .. } => write!(f, "Attach experimenter #{index}"),
            Self::CollapseFilterSets => write!(f, "Collapse filter sets"),
        }
    }
}

/// Overwrite the fields of Experimenter `index`, creating it when absent.
/// Empty identity fields clear the corresponding attribute.
pub fn attach_experimenter(metadata: &mut OmeMetadata, identity: &ExperimenterIdentity, index: usize) {
    let record = metadata.experimenter_mut(index);
    for (key, value) in [
        ("Email", &identity.email),
        ("FirstName", &identity.first_name),
        ("LastName", &identity.last_name),
        ("Institution", &identity.institution),
    ] {
        if value.is_empty() {
            record.remove_attr(key);
        } else {
            record.set_attr(key, value.as_str());
        }
    }
    debug!(index, email = %identity.email, "Experimenter attached");
}

/// Counts of instrument components dropped by [`collapse_filter_sets`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollapseSummary {
    pub filter_sets_removed: usize,
    pub dichroics_removed: usize,
    pub filters_removed: usize,
}

/// Relink every channel of each image to its first channel's FilterSet and
/// drop the FilterSets, Dichroics and Filters that end up unreferenced.
///
/// CZI conversions emit one FilterSet per channel even when the optical path
/// is shared. The FilterSets are assumed identical; their contents are not
/// compared.
pub fn collapse_filter_sets(metadata: &mut OmeMetadata) -> CollapseSummary {
    let mut summary = CollapseSummary::default();

    for image in 0..metadata.image_count() {
        let links = metadata.channel_filter_sets(image);
        let Some(Some(kept)) = links.first().cloned() else {
            continue;
        };

        let mut orphaned: Vec<String> = Vec::new();
        for (channel, link) in links.iter().enumerate().skip(1) {
            if link.as_deref() == Some(kept.as_str()) {
                continue;
            }
            if metadata.link_channel_filter_set(image, channel, &kept).is_err() {
                continue;
            }
            if let Some(old) = link {
                if !orphaned.contains(old) {
                    orphaned.push(old.clone());
                }
            }
        }

        for id in orphaned {
            if metadata.reference_count(&id) > 0 {
                continue;
            }
            remove_filter_set(metadata, &id, &mut summary);
        }
    }

    summary
}

fn remove_filter_set(metadata: &mut OmeMetadata, id: &str, summary: &mut CollapseSummary) {
    let Some(filter_set) = metadata.find_filter_set(id) else {
        return;
    };
    let dichroics: Vec<String> = ref_ids(filter_set, "DichroicRef");
    let filters: Vec<String> = ref_ids(filter_set, "ExcitationFilterRef")
        .into_iter()
        .chain(ref_ids(filter_set, "EmissionFilterRef"))
        .collect();

    summary.filter_sets_removed += metadata.remove_instrument_component("FilterSet", id);

    for dichroic in dichroics {
        if metadata.reference_count(&dichroic) == 0 {
            summary.dichroics_removed += metadata.remove_instrument_component("Dichroic", &dichroic);
        }
    }
    for filter in filters {
        if metadata.reference_count(&filter) == 0 {
            summary.filters_removed += metadata.remove_instrument_component("Filter", &filter);
        }
    }
    debug!(filter_set = id, "Removed orphaned filter set");
}

fn ref_ids(element: &super::xml::Element, name: &str) -> Vec<String> {
    element
        .children_named(name)
        .filter_map(|r| r.attr("ID"))
        .map(str::to_string)
        .collect()
}

/// Reduce the tree to one canonical image sized like the merged output.
///
/// Image 0 is the template: it is renamed to `name`, its Pixels SizeX/SizeY
/// are replaced, and every other Image is discarded.
pub fn retain_single_image(metadata: &mut OmeMetadata, name: &str, size_x: u32, size_y: u32) -> Result<()> {
    metadata.set_image_name(0, name)?;
    metadata.set_pixels_size(0, size_x, size_y)?;
    metadata.retain_image(0)?;
    Ok(())
}
