//! Instruction template for policy analysis.
//!
//! The renderer inserts model output as raw markup, so the tag vocabulary
//! below (`ul`, `li`, `span`, `b`, `i`) is part of the output contract.

/// Required shape of the model's answer.
pub const OUTPUT_FORMAT: &str = r#"A short summary of the privacy policy and its implications, followed by a list of points:
<ul>
    <li>Specific observation or <span style="color:red">critique</span> of the privacy policy</li>
    <li>Another observation or critique</li>
    <li>Continue listing points as necessary</li>
    <li>Each point should follow this structure for consistency</li>
    <li>You can use <span>, <b>, <i> tags with colors to draw focus</li>
</ul>"#;

/// Wrap extracted policy text in the analysis instructions.
pub fn build_prompt(policy: &str) -> String {
    format!(
        "Analyze the following privacy policy, identifying its shortcomings, vague terms, \
         potential risks to user privacy, and any negative aspects. List these as specific \
         points in a concise, non-technical language that is accessible to users. \
         The output MUST STRICTLY follow this format:\n\
         \n\
         {OUTPUT_FORMAT}\n\
         \n\
         Here is the policy text:\n\
         {policy}"
    )
}
