//! Human-readable dump of a resolved image configuration.

use crate::config::ImageConfiguration;

impl ImageConfiguration {
    /// Summary lines in display order.
    ///
    /// The contents block is always present; other blocks only appear when
    /// something in them is set.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            "image configuration:".to_string(),
            "  contents:".to_string(),
            format!("    repositories: {}", list(&self.contents.repositories)),
            format!("    keyring:      {}", list(&self.contents.keyring)),
            format!("    packages:     {}", list(&self.contents.packages)),
        ];

        let ep = &self.entrypoint;
        if !ep.type_.is_empty()
            || !ep.command.is_empty()
            || !ep.services.is_empty()
            || !ep.shell_fragment.is_empty()
        {
            lines.push("  entrypoint:".to_string());
            lines.push(format!("    type:    {}", ep.type_));
            lines.push(format!("    command: {}", ep.command));
            lines.push(format!("    services: {}", list(&ep.services)));
            lines.push(format!("    shell fragment: {}", ep.shell_fragment));
        }

        if !self.cmd.is_empty() {
            lines.push(format!("  cmd: {}", self.cmd));
        }

        if !self.work_dir.is_empty() {
            lines.push(format!("  work-dir: {}", self.work_dir));
        }

        let accounts = &self.accounts;
        if !accounts.run_as.is_empty() || !accounts.users.is_empty() || !accounts.groups.is_empty()
        {
            lines.push("  accounts:".to_string());
            lines.push(format!("    runas:  {}", accounts.run_as));
            lines.push("    users:".to_string());
            for u in &accounts.users {
                lines.push(format!("      - uid={}({}) gid={}", u.uid, u.username, u.gid));
            }
            lines.push("    groups:".to_string());
            for g in &accounts.groups {
                lines.push(format!(
                    "      - gid={}({}) members={}",
                    g.gid,
                    g.groupname,
                    list(&g.members)
                ));
            }
        }

        if !self.environment.is_empty() {
            lines.push("  environment:".to_string());
            for (key, value) in &self.environment {
                lines.push(format!("    {}={}", key, value));
            }
        }

        if !self.archs.is_empty() {
            lines.push(format!("  archs: {}", list(&self.archs)));
        }

        let os = &self.os_release;
        let os_fields = [
            ("id:         ", &os.id),
            ("name:       ", &os.name),
            ("pretty-name:", &os.pretty_name),
            ("version-id: ", &os.version_id),
            ("home-url:   ", &os.home_url),
        ];
        if os_fields.iter().any(|(_, value)| !value.is_empty()) {
            lines.push("  os-release:".to_string());
            for (label, value) in os_fields.iter().filter(|(_, value)| !value.is_empty()) {
                lines.push(format!("    {} {}", label, value));
            }
        }

        if !self.vcs_url.is_empty() {
            lines.push(format!("  vcs-url: {}", self.vcs_url));
        }

        lines
    }

    /// Log the summary, one `info` event per line.
    pub fn summarize(&self) {
        for line in self.summary_lines() {
            tracing::info!("{}", line);
        }
    }
}

fn list(items: &[String]) -> String {
    format!("[{}]", items.join(" "))
}
