/// Configuration name as exposed in the catalog.
/// Examples: `random_1k`, `first_50k`, `all`, `text_only`
pub type ConfigName = String;
/// Key emitted alongside each example (image filename).
/// Examples: `f3501e05-aef7-4225-a9e9-f516527408ac.png`
pub type ExampleKey = String;
/// Prompt text as written by the user who generated the image.
/// Example: `a painting of a cat wearing a crown, trending on artstation`
pub type Prompt = String;
/// Remote namespace that all resource paths are relative to.
/// Example: `datasets/poloclub/diffusiondb`
pub type Namespace = String;
/// Rendered resource identifier (`<namespace>/<path>`).
/// Example: `datasets/poloclub/diffusiondb/images/part-000001.zip`
pub type ResourcePath = String;
/// Image filename relative to an extracted shard directory.
/// Example: `0a8e3bb5-6d5a-4a8a-93d4-9b8c1a7a4c5e.webp`
pub type ImageName = String;
