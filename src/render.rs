use std::path::Path;

use crate::model::plan::InstallPlan;

/// Shown when a script holds no classifiable lines at all.
pub const EMPTY_PLAN_MESSAGE: &str = "No install commands were found in the script.\n\
Make sure it contains winget / choco / pip commands.";

/// Human-readable summary of a plan: one numbered section per non-empty
/// bucket, in display order.
pub fn render_plan(plan: &InstallPlan) -> String {
    let sections: Vec<String> = plan
        .iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(bucket, lines)| {
            let mut section = format!("{} ({}):\n", bucket.label(), lines.len());
            for (i, line) in lines.iter().enumerate() {
                section.push_str(&format!("  {}. {line}\n", i + 1));
            }
            section
        })
        .collect();

    if sections.is_empty() {
        return EMPTY_PLAN_MESSAGE.to_string();
    }

    sections.join("\n")
}

/// Message shown in place of a plan when the script does not exist.
pub fn render_missing(script: &Path) -> String {
    let name = script
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "installer.ps1".to_string());
    format!(
        "Could not find {name} next to the installer.\nExpected path:\n{}",
        script.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PlanExtractor;

    #[test]
    fn empty_plan_renders_placeholder() {
        assert_eq!(render_plan(&InstallPlan::missing()), EMPTY_PLAN_MESSAGE);

        let only_comments = PlanExtractor::default().scan("# a\n\n# b\n");
        let text = render_plan(&only_comments);
        assert!(!text.is_empty());
        assert_eq!(text, EMPTY_PLAN_MESSAGE);
    }

    #[test]
    fn sections_are_numbered_and_skip_empty_buckets() {
        let plan = PlanExtractor::default()
            .scan("winget install git\nwinget install --id Python.Python.3.12\nWrite-Host hi\n");

        assert_eq!(
            render_plan(&plan),
            "Winget Packages (2):\n  1. winget install git\n  2. winget install --id Python.Python.3.12\n\
             \nOther Commands (1):\n  1. Write-Host hi\n"
        );
    }

    #[test]
    fn render_is_deterministic() {
        let plan = PlanExtractor::default().scan("choco install a\npip install b\n");
        assert_eq!(render_plan(&plan), render_plan(&plan.clone()));
    }

    #[test]
    fn missing_message_names_script() {
        let text = render_missing(Path::new("/opt/wdt/installer.ps1"));
        assert!(text.starts_with("Could not find installer.ps1"));
        assert!(text.ends_with("/opt/wdt/installer.ps1"));
    }
}
